//! Property-based tests for whisper-cli

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::path::PathBuf;
    use whisper_core::Identity;

    use crate::config::{CliOverrides, Config};
    use crate::identity::KeyFile;
    use crate::output::{format_sol, OutputFormat, OutputFormatter};

    fn any_format() -> impl Strategy<Value = OutputFormat> {
        prop_oneof![
            Just(OutputFormat::Table),
            Just(OutputFormat::Json),
            Just(OutputFormat::Quiet),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Any key file written by `save` loads back to the same identity.
        #[test]
        fn key_file_round_trip(seed in any::<[u8; 32]>()) {
            let dir = tempfile::TempDir::new().unwrap();
            let key_file = KeyFile::new(dir.path().join("id.json"));
            let identity = Identity::from_signing_key(ed25519_dalek::SigningKey::from_bytes(&seed));

            key_file.save(&identity).unwrap();
            let loaded = key_file.load().unwrap().unwrap();
            prop_assert_eq!(loaded.address(), identity.address());
            prop_assert_eq!(loaded.to_keypair_bytes(), identity.to_keypair_bytes());
        }

        /// Arbitrary bytes in a key file never panic and never load a wrong identity.
        #[test]
        fn key_file_rejects_garbage(contents in ".{0,200}") {
            let dir = tempfile::TempDir::new().unwrap();
            let path = dir.path().join("id.json");
            std::fs::write(&path, &contents).unwrap();

            if let Ok(Some(identity)) = KeyFile::new(&path).load() {
                let bytes: Vec<u8> = serde_json::from_str(&contents).unwrap();
                let address = identity.address();
                prop_assert_eq!(&bytes[32..], &address.as_bytes()[..]);
            }
        }

        /// Saved configs parse back with the same values.
        #[test]
        fn config_toml_round_trip(
            timeout in 1u64..3600,
            page_limit in 1usize..=1000,
            format in any_format(),
            verbose in any::<bool>(),
        ) {
            let mut config = Config::default();
            config.ledger.timeout_seconds = timeout;
            config.ledger.page_limit = page_limit;
            config.output.format = format.to_string();
            config.output.verbose = verbose;
            prop_assert!(config.validate().is_ok());

            let text = toml::to_string_pretty(&config).unwrap();
            let parsed: Config = toml::from_str(&text).unwrap();
            prop_assert_eq!(parsed.ledger.timeout_seconds, timeout);
            prop_assert_eq!(parsed.ledger.page_limit, page_limit);
            prop_assert_eq!(&parsed.output.format, &format.to_string());
            prop_assert_eq!(parsed.output.verbose, verbose);
        }

        /// CLI overrides always win over file values.
        #[test]
        fn overrides_take_precedence(
            format in any_format(),
            port in 1024u16..65535,
            key in "[a-z]{1,12}",
        ) {
            let rpc_url = format!("http://127.0.0.1:{port}");
            let key_path = PathBuf::from(format!("/tmp/{key}.json"));
            let overrides = CliOverrides {
                output_format: Some(format.to_string()),
                rpc_url: Some(rpc_url.clone()),
                key_path: Some(key_path.clone()),
                ..Default::default()
            };

            let config = Config::default().with_overrides(&overrides);
            prop_assert_eq!(&config.output.format, &format.to_string());
            prop_assert_eq!(&config.ledger.rpc_url, &rpc_url);
            prop_assert_eq!(config.key_path(), Some(key_path));
        }

        /// SOL formatting keeps every lamport.
        #[test]
        fn sol_formatting_is_exact(lamports in any::<u64>()) {
            let text = format_sol(lamports);
            let digits: String = text.chars().filter(|c| *c != '.').collect();
            prop_assert_eq!(digits.parse::<u128>().unwrap(), lamports as u128);
            prop_assert_eq!(text.split('.').nth(1).map(str::len), Some(9));
        }

        /// Quiet output is always empty.
        #[test]
        fn quiet_output_is_empty(lamports in any::<u64>()) {
            let formatter = OutputFormatter::new(OutputFormat::Quiet, true);
            prop_assert_eq!(formatter.format_balance("addr", lamports), "");
            prop_assert_eq!(formatter.format_messages(&[]), "");
        }
    }
}
