use std::fmt;

/// ngrok hands out TCP tunnel ports in this range.
pub const PORT_START: u16 = 10000;
/// Exclusive.
pub const PORT_END: u16 = 20000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Every port in the tunnel range for every host, host-major and in the
/// order the hosts were given.
pub fn generate<I, S>(hosts: I) -> Vec<Endpoint>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut endpoints = Vec::new();
    for host in hosts {
        let host = host.as_ref();
        endpoints.extend((PORT_START..PORT_END).map(|port| Endpoint::new(host, port)));
    }
    endpoints
}

/// Split `items` into `parts` contiguous chunks.
///
/// Item `i` goes into chunk `floor(i / (len / parts))`, so chunk sizes can be
/// off by one from each other. If there are fewer items than parts some
/// chunks are empty. A `parts` of 0 is treated as 1.
pub fn partition<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let parts = parts.max(1);
    let part_size = items.len() as f64 / parts as f64;

    let mut chunks: Vec<Vec<T>> = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        let part = ((i as f64 / part_size) as usize).min(parts - 1);
        while chunks.len() <= part {
            chunks.push(Vec::new());
        }
        chunks[part].push(item);
    }
    chunks
}
