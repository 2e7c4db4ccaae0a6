//! Device endpoint definition.

use secrecy::SecretString;

/// Default Telnet port.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Address and credentials for one device.
///
/// Immutable once a session starts; the password is held as a
/// [`SecretString`] so it is redacted from `Debug` output and zeroized
/// on drop.
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    /// Target host (hostname or IP address).
    pub host: String,

    /// Telnet port (default: 23).
    pub port: u16,

    /// Username sent at the login prompt.
    pub username: String,

    /// Password sent at the password prompt.
    pub password: SecretString,
}

impl DeviceEndpoint {
    /// Create an endpoint on the default Telnet port.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_TELNET_PORT,
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
