use anyhow::{ensure, Error};
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version, about = "Bounded media upload and preview pipeline")]
pub struct ConfigContext {
    #[arg(
        short = 'p',
        long = "port",
        env = "MEDIAQ_PORT",
        help = "Streaming upload port",
        default_value = "50051"
    )]
    pub port: u16,

    #[arg(
        long = "http",
        env = "MEDIAQ_HTTP_PORT",
        help = "HTTP server port",
        default_value = "8080"
    )]
    pub http_port: u16,

    #[arg(
        short = 'c',
        long = "workers",
        env = "MEDIAQ_WORKERS",
        help = "Number of worker tasks",
        default_value = "2"
    )]
    pub workers: usize,

    #[arg(
        short = 'q',
        long = "queue",
        env = "MEDIAQ_QUEUE",
        help = "Maximum number of admitted jobs waiting for a worker",
        default_value = "5"
    )]
    pub queue: usize,

    #[arg(
        long = "bind",
        env = "MEDIAQ_BIND",
        help = "Listen address for both servers",
        default_value = "0.0.0.0"
    )]
    pub bind: IpAddr,

    #[arg(
        long = "uploads",
        env = "MEDIAQ_UPLOADS",
        help = "Directory holding uploads and derived artifacts",
        default_value = "uploads"
    )]
    pub uploads: PathBuf,

    #[arg(
        long = "static-dir",
        env = "MEDIAQ_STATIC",
        help = "Dashboard asset directory",
        default_value = "static"
    )]
    pub static_dir: PathBuf,

    #[arg(
        long = "ffmpeg",
        env = "MEDIAQ_FFMPEG",
        help = "ffmpeg executable",
        default_value = "ffmpeg"
    )]
    pub ffmpeg: PathBuf,

    #[arg(
        long = "max-upload-mb",
        env = "MEDIAQ_MAX_UPLOAD_MB",
        help = "Largest accepted HTTP form upload, in MiB",
        default_value = "50"
    )]
    pub max_upload_mb: usize,

    #[arg(
        long = "jaeger",
        env = "MEDIAQ_JAEGER",
        help = "Jaeger agent address (host:port); tracing export is off when unset"
    )]
    pub jaeger: Option<String>,
}

impl ConfigContext {
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(self.workers > 0, "worker count must be at least 1");
        ensure!(self.queue > 0, "queue capacity must be at least 1");
        ensure!(
            self.port == 0 || self.port != self.http_port,
            "streaming and HTTP ports must differ (both {})",
            self.port
        );
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConfigContext::try_parse_from(["mediaq"]).unwrap();
        assert_eq!(config.port, 50051);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue, 5);
        assert_eq!(config.uploads, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
        assert!(config.jaeger.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_flags() {
        let config = ConfigContext::try_parse_from(["mediaq", "-c", "4", "-q", "10", "-p", "6000"]).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue, 10);
        assert_eq!(config.port, 6000);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = ConfigContext::try_parse_from(["mediaq", "-c", "0"]).unwrap();
        assert!(config.validate().is_err());

        let config = ConfigContext::try_parse_from(["mediaq", "-q", "0"]).unwrap();
        assert!(config.validate().is_err());

        let config = ConfigContext::try_parse_from(["mediaq", "-p", "8080"]).unwrap();
        assert!(config.validate().is_err());
    }
}
