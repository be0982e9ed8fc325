//! `_minecraft._tcp` SRV lookup.

use std::{net::IpAddr, time::Duration};

use serde::Serialize;
use tracing::{debug, warn};
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf::read_system_conf,
    Resolver,
};

/// Target a hostname was redirected to by its SRV record.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for SrvRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Anything able to answer an SRV query for a Minecraft host.
///
/// Failures are not errors: a resolver that cannot answer returns `None`
/// and the caller keeps its original target.
pub trait SrvResolver {
    fn lookup(&self, host: &str) -> Option<SrvRecord>;
}

/// Resolver backed by the system DNS configuration.
#[derive(Debug, Clone)]
pub struct DnsSrvResolver {
    timeout: Duration,
}

impl DnsSrvResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// System options with this resolver's timeout and a single attempt.
    fn resolver_opts(&self, mut opts: ResolverOpts) -> ResolverOpts {
        opts.timeout = self.timeout;
        opts.attempts = 1;
        opts
    }
}

impl Default for DnsSrvResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Name servers and options from the host (`/etc/resolv.conf` or the
/// Windows registry), falling back to the built-in defaults.
fn system_conf() -> (ResolverConfig, ResolverOpts) {
    match read_system_conf() {
        Ok(conf) => conf,
        Err(err) => {
            warn!("cannot read system DNS configuration, using defaults: {}", err);
            (ResolverConfig::default(), ResolverOpts::default())
        }
    }
}

impl SrvResolver for DnsSrvResolver {
    fn lookup(&self, host: &str) -> Option<SrvRecord> {
        // Literal addresses never have SRV records.
        if host.parse::<IpAddr>().is_ok() {
            return None;
        }

        let (config, opts) = system_conf();
        let resolver = match Resolver::new(config, self.resolver_opts(opts)) {
            Ok(resolver) => resolver,
            Err(err) => {
                warn!("cannot create DNS resolver: {}", err);
                return None;
            }
        };

        let name = format!("_minecraft._tcp.{}", host);

        match resolver.srv_lookup(name.as_str()) {
            Ok(lookup) => lookup.iter().next().map(|srv| {
                let record = SrvRecord {
                    host: srv.target().to_utf8().trim_end_matches('.').to_string(),
                    port: srv.port(),
                };

                debug!("{} has SRV record {}", name, record);
                record
            }),
            Err(err) => {
                debug!("no SRV record for {}: {}", name, err);
                None
            }
        }
    }
}
