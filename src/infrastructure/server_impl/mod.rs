pub mod codec;
pub mod config;
pub(crate) mod connection;
pub mod request;
pub mod response;
pub mod server;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

    use crate::application::observer::Observer;
    use crate::domain::headers::HeaderTable;
    use crate::infrastructure::server_impl::request::Request;
    use crate::infrastructure::server_impl::response::Response;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Parsed(String),
        Ready(String, u16, Duration),
    }

    /// Remembers every observer call, shared between clones.
    #[derive(Debug, Clone, Default)]
    pub struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Observer for Recorder {
        fn request_parsed(&self, request: &Request) {
            self.0.lock().unwrap().push(Event::Parsed(request.path.clone()));
        }

        fn response_ready(&self, request: &Request, response: &Response, elapsed: Duration) {
            self.0.lock().unwrap().push(Event::Ready(
                request.path.clone(),
                response.status_code.as_u16(),
                elapsed,
            ));
        }
    }

    /// Reads one response off the client side of a connection.
    pub async fn read_response<R>(reader: &mut R) -> (u16, HeaderTable, Vec<u8>)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let status = line
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or_else(|| panic!("bad status line {line:?}"));

        let mut headers = HeaderTable::new();
        loop {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(": ").unwrap();
            headers.add(name, value);
        }

        let length = headers.get_or("content-length", "0").parse().unwrap();
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.unwrap();
        (status, headers, body)
    }
}
