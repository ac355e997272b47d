pub mod file_sink;
pub mod http_session;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_server;
