//! # Configuration
//!
//! Utilities to configure the text editor.

use std::env;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// The global kilo configuration.
pub struct Config {
    /// The size of a tab. Must be > 0.
    pub(crate) tab_stop: usize,
    /// The number of confirmations needed before quitting, when changes have been made since the
    /// file was last saved.
    pub(crate) quit_times: usize,
    /// The duration for which messages are shown in the status bar.
    pub(crate) message_duration: Duration,
    /// The paths to directories that may hold a `config.ini`, in load order (later overrides
    /// earlier).
    pub(crate) conf_dirs: Vec<PathBuf>,
}

impl Config {
    /// Load the configuration, potentially overridden using `config.ini` files that can be located
    /// in the following directories, in this order (later files override earlier ones):
    ///   - `/etc/kilo` (system-wide configuration).
    ///   - `$XDG_CONFIG_HOME/kilo` if environment variable `$XDG_CONFIG_HOME` is defined,
    ///     `$HOME/.config/kilo` otherwise (user-level configuration).
    ///
    /// # Errors
    ///
    /// Will return `Err` if one of the configuration files cannot be parsed properly.
    pub fn load() -> Result<Self, Error> {
        let mut conf = Self {
            tab_stop: 8,
            quit_times: 3,
            message_duration: Duration::from_secs(5),
            conf_dirs: vec![PathBuf::from("/etc/kilo")],
        };

        if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
            conf.conf_dirs.push(Path::new(&xdg_config_home).join("kilo"));
        } else if let Ok(home) = env::var("HOME") {
            conf.conf_dirs.push(Path::new(&home).join(".config/kilo"));
        }

        let conf_paths: Vec<PathBuf> =
            conf.conf_dirs.iter().map(|p| p.join("config.ini")).filter(|p| p.exists()).collect();

        for path in conf_paths {
            process_ini_file(&path, &mut |key, value| {
                match key {
                    "tab_stop" => match parse_value(value)? {
                        0 => return Err("tab_stop must be > 0".into()),
                        tab_stop => conf.tab_stop = tab_stop,
                    },
                    "quit_times" => conf.quit_times = parse_value(value)?,
                    "message_duration" => {
                        conf.message_duration = Duration::from_secs_f32(parse_value(value)?);
                    }
                    _ => return Err(format!("Invalid key: {key}")),
                }
                Ok(())
            })?;
        }

        Ok(conf)
    }
}

/// Process an INI file line by line, calling `deser_fn` with each key-value pair.
///
/// Lines starting with `#` or `;` are comments; empty lines are skipped. Any other error is
/// reported as [`Error::Config`], carrying the file path, the 1-based line number, and a message.
pub(crate) fn process_ini_file<F>(path: &Path, deser_fn: &mut F) -> Result<(), Error>
where F: FnMut(&str, &str) -> Result<(), String> {
    for (lineno, line) in BufReader::new(File::open(path)?).lines().enumerate() {
        let line = line?;
        let mut parts = line.trim_start().splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(comment_line), _) if comment_line.starts_with(['#', ';']) => (),
            (Some(k), Some(v)) => deser_fn(k.trim_end(), v)
                .map_err(|msg| Error::Config(path.to_path_buf(), lineno + 1, msg))?,
            (Some(""), None) | (None, _) => (), // Empty line
            (Some(_), None) => {
                return Err(Error::Config(path.to_path_buf(), lineno + 1, String::from("No '='")));
            }
        }
    }
    Ok(())
}

/// Trim a value (right-hand side of a key=value INI line) and parse it.
pub(crate) fn parse_value<T: FromStr<Err = E>, E: Display>(value: &str) -> Result<T, String> {
    value.trim().parse().map_err(|e| format!("Parser error: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn ini_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.ini");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn process_ini_file_collects_key_value_pairs() {
        let dir = TempDir::new().unwrap();
        let path = ini_file(&dir, "# a comment\ntab_stop = 4\n; another comment\nquit_times=1\n\n");
        let mut seen = HashMap::new();
        process_ini_file(&path, &mut |k, v| {
            seen.insert(k.to_string(), v.trim().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen.get("tab_stop"), Some(&"4".to_string()));
        assert_eq!(seen.get("quit_times"), Some(&"1".to_string()));
    }

    #[test]
    fn process_ini_file_rejects_line_without_equals() {
        let dir = TempDir::new().unwrap();
        let path = ini_file(&dir, "tab_stop = 4\nnot_a_pair\n");
        let err = process_ini_file(&path, &mut |_, _| Ok(())).unwrap_err();
        match err {
            Error::Config(p, lineno, msg) => {
                assert_eq!(p, path);
                assert_eq!(lineno, 2);
                assert_eq!(msg, "No '='");
            }
            other => panic!("expected Error::Config, got {other:?}"),
        }
    }

    #[test]
    fn process_ini_file_surfaces_deser_error_with_line_number() {
        let dir = TempDir::new().unwrap();
        let path = ini_file(&dir, "tab_stop = 4\nquit_times = -1\n");
        let err = process_ini_file(&path, &mut |key, value| match key {
            "tab_stop" => Ok(()),
            "quit_times" => parse_value::<usize, _>(value).map(|_: usize| ()),
            _ => Err("unexpected key".to_string()),
        })
        .unwrap_err();
        match err {
            Error::Config(_, lineno, _) => assert_eq!(lineno, 2),
            other => panic!("expected Error::Config, got {other:?}"),
        }
    }

    #[test]
    fn parse_value_trims_whitespace() {
        let n: usize = parse_value(" 42 \n").unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn parse_value_reports_parser_error() {
        let err = parse_value::<usize, _>("not a number").unwrap_err();
        assert!(err.starts_with("Parser error:"));
    }
}
