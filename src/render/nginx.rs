//! nginx server block emitter

use std::fmt::Write as _;

use crate::schema::SiteConfig;

/// Render the server block for a site
pub fn server_block(site: &SiteConfig) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "server {{");
    let _ = writeln!(out, "    listen {};", site.listen);
    let _ = writeln!(out, "    server_name {};", site.server_name);
    let _ = writeln!(out);
    let _ = writeln!(out, "    client_max_body_size {};", site.client_max_body_size);

    for location in &site.locations {
        let upstream = location.upstream.as_deref().unwrap_or(&site.upstream);

        let _ = writeln!(out);
        let _ = writeln!(out, "    location {} {{", location.path);
        let _ = writeln!(out, "        proxy_pass http://{};", upstream);
        let _ = writeln!(out, "        proxy_set_header Host $host;");
        let _ = writeln!(out, "        proxy_set_header X-Real-IP $remote_addr;");
        let _ = writeln!(
            out,
            "        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"
        );
        let _ = writeln!(out, "        proxy_set_header X-Forwarded-Proto $scheme;");
        let _ = writeln!(
            out,
            "        proxy_connect_timeout {}s;",
            site.proxy_connect_timeout
        );
        let _ = writeln!(out, "        proxy_send_timeout {}s;", site.proxy_send_timeout);
        let _ = writeln!(out, "        proxy_read_timeout {}s;", site.proxy_read_timeout);
        let _ = writeln!(out, "    }}");
    }

    let _ = writeln!(out, "}}");
    out
}
