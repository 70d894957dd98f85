//! `adm gateway classify`: show how the gateway would route a URL.

use std::sync::Arc;

use adm_gateway::{Gateway, HttpFetcher, Method};
use anyhow::{Context, Result};

use super::load_config;

pub fn classify(config_paths: &[String], url: &str, method: &str) -> Result<()> {
    let (_loaded, cfg) = load_config(config_paths)?;
    // Building the gateway performs no I/O; the fetcher is never called here.
    let gateway = Gateway::new(cfg.gateway, Arc::new(HttpFetcher::new()))?;

    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method: {method}"))?;
    let req = gateway.request(method, url)?;

    println!("url={}", req.url);
    if !gateway.intercepts(&req) {
        println!("intercepted=false");
        return Ok(());
    }
    let class = gateway.classify(&req.url);
    println!("intercepted=true");
    println!("class={}", class.as_str());
    println!("strategy={}", class.strategy().as_str());
    Ok(())
}
