use std::time::Duration;

use tracing::{debug, warn};

use super::pool::{EgressPath, EgressPool, Outcome};

/// Build a client routed through `path`. Direct paths disable env/system proxies too.
pub fn client_for(path: &EgressPath, timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout);

    builder = match path.proxy_url() {
        Some(url) => builder.proxy(reqwest::Proxy::all(url)?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Fetch `check_url` through one path from the pool and feed the result back.
pub async fn probe_egress(pool: &EgressPool, check_url: &str, timeout: Duration) -> bool {
    let path = pool.choose();

    let result = async {
        let client = client_for(&path, timeout)?;
        client.get(check_url).send().await?.error_for_status()
    }
    .await;

    match result {
        Ok(resp) => {
            debug!(egress = %path.redacted(), direct = path.is_direct(), status = %resp.status(), "Egress probe succeeded");
            pool.report(&path, Outcome::Success);
            true
        }
        Err(e) => {
            warn!(egress = %path.redacted(), direct = path.is_direct(), error = %e.without_url(), "Egress probe failed");
            pool.report(&path, Outcome::Failure);
            false
        }
    }
}
