use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_matches(
    err: &(dyn StdError + 'static),
    io_kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == io_kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport-level failure into a user-facing detail line.
///
/// `api_url` must not carry the credential.
pub(crate) fn network_error_detail(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: u64,
) -> String {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return format!(
            "Model request timed out after {timeout_secs}s while calling '{api_url}'. \
             Increase MODEL_TIMEOUT_SECS or check model responsiveness."
        );
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return format!(
                "Connection refused by model API at '{api_url}'. \
                 Check API_BASE_URL and network connectivity."
            );
        }

        return format!(
            "Failed to connect to model API at '{api_url}'. \
             Check API_BASE_URL, DNS resolution and network connectivity."
        );
    }

    // The request URL carries the key as a query parameter.
    let err = err.without_url();
    format!("Failed to call model API at '{api_url}': {err}")
}

#[cfg(test)]
mod tests {
    use super::{error_chain_has_connection_refused, error_chain_has_timeout, network_error_detail};
    use reqwest::Client;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn free_local_addr() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn maps_connection_refused_errors_to_actionable_message() {
        let addr = free_local_addr();
        let api_url = format!("http://{}/v1beta/models/m:generateContent", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(300))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .query(&[("key", "secret")])
            .send()
            .await
            .expect_err("request should fail with connection-refused");
        let msg = network_error_detail(req_err, &api_url, 1);

        assert!(
            msg.contains("Connection refused by model API"),
            "unexpected message: {msg}"
        );
        assert!(msg.contains("API_BASE_URL"), "unexpected message: {msg}");
        assert!(!msg.contains("secret"), "credential leaked: {msg}");
    }

    #[tokio::test]
    async fn maps_timeout_errors_to_actionable_message() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let addr = listener.local_addr().expect("address should be available");
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().expect("accept should succeed");
            thread::sleep(Duration::from_secs(1));
        });

        let api_url = format!("http://{}/v1beta/models/m:generateContent", addr);
        let client = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("client should build");

        let req_err = client
            .post(&api_url)
            .send()
            .await
            .expect_err("request should fail with timeout");
        let msg = network_error_detail(req_err, &api_url, 2);

        assert!(
            msg.contains("Model request timed out after 2s"),
            "unexpected message: {msg}"
        );
        assert!(
            msg.contains("MODEL_TIMEOUT_SECS"),
            "unexpected message: {msg}"
        );

        server.join().expect("server thread should join");
    }

    #[test]
    fn detects_timeout_from_error_kind() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert!(error_chain_has_timeout(&err));
    }

    #[test]
    fn detects_connection_refused_from_message() {
        let err = std::io::Error::other("tcp connect error: Connection refused (os error 111)");
        assert!(error_chain_has_connection_refused(&err));
        assert!(!error_chain_has_timeout(&err));
    }
}
