use crate::error::Error;

/// Connection options for [`crate::client::NativeClient`].
///
/// ```
/// use cube_native_adbc::Opts;
///
/// let opts: Opts = "cube://mytoken@localhost:4445/main".try_into().unwrap();
/// assert_eq!(opts.port, 4445);
/// ```
#[derive(Debug, Clone)]
pub struct Opts {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub database: Option<String>,
    pub connection_mode: String,
}

impl Opts {
    pub const DEFAULT_PORT: u16 = 4445;

    pub fn validate(&self) -> Result<(), Error> {
        if self.host.is_empty() {
            return Err(Error::InvalidArgument("missing host".to_string()));
        }
        if self.token.is_empty() {
            return Err(Error::InvalidArgument("missing token".to_string()));
        }
        if self.connection_mode != "native" {
            return Err(Error::InvalidArgument(format!(
                "unsupported connection_mode '{}', this core only implements 'native'",
                self.connection_mode
            )));
        }
        Ok(())
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("failed to parse cube URL: {e}")))?;

        if parsed.scheme() != "cube" {
            return Err(Error::InvalidArgument(format!(
                "invalid URL scheme '{}', expected 'cube'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidArgument("missing host in cube URL".to_string()))?
            .to_string();
        let port = parsed.port().unwrap_or(Self::DEFAULT_PORT);
        let token = parsed.username().to_string();
        let database = parsed
            .path()
            .strip_prefix('/')
            .filter(|db| !db.is_empty())
            .map(ToString::to_string);

        let opts = Self {
            host,
            port,
            token,
            database,
            connection_mode: "native".to_string(),
        };
        opts.validate()?;
        Ok(opts)
    }
}
