/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::api::ApiClient;
use crate::session::SessionStore;

#[derive(Deserialize)]
struct ConfigFile {
    api_base_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    session_file: Option<String>,
    template_dir: Option<String>,
    static_dir: Option<String>,
}

#[derive(Debug)]
pub struct Cfg {
    pub api_base_url: String,
    pub addr: SocketAddr,
    pub session_file: PathBuf,
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/".to_owned(),
            addr: SocketAddr::new(
                "0.0.0.0".parse().unwrap(),
                8001
            ),
            session_file: PathBuf::from("data/sessions.json"),
            template_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        let cf: ConfigFile = toml::from_str(&file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.api_base_url {
            c.api_base_url = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.session_file {
            c.session_file = PathBuf::from(s);
        }
        if let Some(s) = cf.template_dir {
            c.template_dir = PathBuf::from(s);
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }

        Ok(c)
    }

    /// Read the config file at `path`, or fall back to defaults if
    /// there is no such file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            log::info!(
                "No config file at {}; using default configuration.",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
#[derive(Debug)]
pub struct Glob {
    pub api: ApiClient,
    pub sessions: SessionStore,
}

/// Readies the shared state the handlers use: the API client pointed at
/// the configured base URL, and the session store with whatever sessions
/// a previous run left on disk.
pub fn load_configuration(cfg: &Cfg) -> Result<Glob, String> {
    log::trace!("load_configuration( [ Cfg ] ) called.");

    let api = ApiClient::new(&cfg.api_base_url)?;

    let sessions = SessionStore::new(&cfg.session_file)
        .map_err(|e| format!("Unable to open session store: {}", e.display()))?;
    log::info!("Session store holds {} session(s).", sessions.len());

    Ok(Glob { api, sessions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    use std::io::Write;

    #[test]
    fn config_file_overrides() {
        ensure_logging();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            &mut f,
            "api_base_url = \"http://api.internal:9090/\"\nport = 8080"
        ).unwrap();

        let cfg = Cfg::from_file(&path).unwrap();
        assert_eq!(cfg.api_base_url, "http://api.internal:9090/");
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.template_dir, PathBuf::from("templates"));
    }

    #[test]
    fn missing_config_file_defaults() {
        ensure_logging();

        let cfg = Cfg::load("no/such/file.toml").unwrap();
        assert_eq!(cfg.addr.port(), 8001);
    }
}
