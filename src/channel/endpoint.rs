use reqwest::Url;

use crate::models::SessionMode;

use super::ChannelError;

/// Base WebSocket address of the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEndpoint {
    base: Url,
}

impl AnalysisEndpoint {
    pub fn new(ws_base: &str) -> Result<Self, ChannelError> {
        let base = Url::parse(ws_base)
            .map_err(|err| ChannelError::InvalidEndpoint(format!("{ws_base}: {err}")))?;
        match base.scheme() {
            "ws" | "wss" => Ok(Self { base }),
            other => Err(ChannelError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {ws_base}"
            ))),
        }
    }

    /// Derives the WebSocket base from the REST base (`http`→`ws`, `https`→`wss`).
    pub fn from_api_base(api_base: &str) -> Result<Self, ChannelError> {
        let mut url = Url::parse(api_base)
            .map_err(|err| ChannelError::InvalidEndpoint(format!("{api_base}: {err}")))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" | "wss" => return Ok(Self { base: url }),
            other => {
                return Err(ChannelError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}' in {api_base}"
                )))
            }
        };
        url.set_scheme(scheme).map_err(|_| {
            ChannelError::InvalidEndpoint(format!("cannot derive websocket url from {api_base}"))
        })?;
        Ok(Self { base: url })
    }

    pub fn url_for(&self, subject_id: i64, mode: SessionMode) -> String {
        let route = match mode {
            SessionMode::Recorded => "analyze",
            SessionMode::Realtime => "analyze_realtime",
        };
        format!(
            "{}/video/{route}/{subject_id}",
            self.base.as_str().trim_end_matches('/')
        )
    }

    /// Encrypted transport, or a loopback host where browsers and operators
    /// alike accept plain connections.
    pub fn is_secure_context(&self) -> bool {
        if self.base.scheme() == "wss" {
            return true;
        }
        match self.base.host_str() {
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1") => true,
            Some(host) => host.ends_with(".localhost"),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_routes_per_mode() {
        let endpoint = AnalysisEndpoint::from_api_base("http://localhost:8000").unwrap();
        assert_eq!(
            endpoint.url_for(4, SessionMode::Recorded),
            "ws://localhost:8000/video/analyze/4"
        );
        assert_eq!(
            endpoint.url_for(4, SessionMode::Realtime),
            "ws://localhost:8000/video/analyze_realtime/4"
        );
    }

    #[test]
    fn https_maps_to_wss() {
        let endpoint = AnalysisEndpoint::from_api_base("https://monitor.example.com/").unwrap();
        assert_eq!(
            endpoint.url_for(9, SessionMode::Recorded),
            "wss://monitor.example.com/video/analyze/9"
        );
        assert!(endpoint.is_secure_context());
    }

    #[test]
    fn plain_remote_host_is_not_secure() {
        let endpoint = AnalysisEndpoint::new("ws://10.0.0.5:8000").unwrap();
        assert!(!endpoint.is_secure_context());
        assert!(AnalysisEndpoint::new("ws://127.0.0.1:8000")
            .unwrap()
            .is_secure_context());
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(AnalysisEndpoint::new("http://localhost").is_err());
        assert!(AnalysisEndpoint::from_api_base("ftp://localhost").is_err());
    }
}
