//! Utility functions for loading proxy lists.

use crate::address::ProxyAddress;
use crate::error::SourceError;

use log::warn;
use reqwest::Client;

/// Fetch and parse a list of proxies from a URL or file path.
pub(crate) async fn load_proxies_from_source(source: &str) -> Result<Vec<String>, SourceError> {
    let content = if source.starts_with("http") {
        let response = Client::new().get(source).send().await?.error_for_status()?;
        response.text().await?
    } else {
        tokio::fs::read_to_string(source).await?
    };
    Ok(parse_proxy_list(&content))
}

/// Parse one proxy per line into canonical base strings.
///
/// Blank lines and `#` comments are skipped, as are lines that do not parse.
pub(crate) fn parse_proxy_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match ProxyAddress::parse(line) {
            Ok(address) => Some(address.base_string()),
            Err(e) => {
                warn!("Skipping proxy entry {:?}: {}", line, e);
                None
            }
        })
        .collect()
}
