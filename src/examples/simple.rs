//! Simple example of using reqwest-proxy-rotor.

use reqwest_proxy_rotor::{PoolError, ProxyAddress, ProxyPool, ProxyPoolConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing proxy pool...");

    let config = ProxyPoolConfig::builder()
        // one proxy per line, `host:port` or `login:password@host:port`
        .sources(vec![
            "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt",
        ])
        .recycle_interval(Duration::from_secs(1))
        .build();

    let pool = ProxyPool::from_sources(config).await;
    pool.add_proxy("127.0.0.1:3128");
    pool.start_recycle()?;

    for round in 0..20 {
        match pool.get_proxy() {
            Ok(proxy) => {
                let url = ProxyAddress::from_base_string(&proxy)?;
                println!("Round {}: using {}", round, url);
                if round % 7 == 6 {
                    pool.blacklist_proxy(proxy);
                } else {
                    pool.return_proxy(proxy);
                }
            }
            Err(PoolError::NoAvailableProxy) => {
                println!("Round {}: pool exhausted, waiting for recycle", round);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("Pool: {:?}", pool.summary());
    println!("Usage: {:?}", pool.stats());

    pool.stop_recycle();
    Ok(())
}
