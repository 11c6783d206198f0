//! Configuration parsing and layering.

use super::*;
use crate::config::{
    ARG_API_KEY, ARG_MEMORY_BUDGET_MB, ARG_TIMEOUT_SECS, DEFAULT_DATA_DIR, ENV_API_KEY,
    SERVICE_COMMAND, config_from_layers_for_test,
};
use camino::Utf8PathBuf;
use clap::CommandFactory;
use ortho_config::MergeComposer;
use photorama_data::{
    HttpTransportConfig, cache::DEFAULT_MEMORY_BUDGET_BYTES, flickr::DEFAULT_ENDPOINT,
};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

fn args_with_key() -> ServiceArgs {
    ServiceArgs {
        api_key: Some("k3y".to_owned()),
        ..ServiceArgs::default()
    }
}

#[rstest]
#[case(None)]
#[case(Some("  "))]
fn converting_without_api_key_errors(#[case] key: Option<&str>) {
    let args = ServiceArgs {
        api_key: key.map(str::to_owned),
        ..ServiceArgs::default()
    };
    let err = AppConfig::try_from(args).expect_err("missing key should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_API_KEY);
            assert_eq!(env, ENV_API_KEY);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn defaults_fill_unset_options() {
    let config = AppConfig::try_from(args_with_key()).expect("config should build");
    assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.data_dir, Utf8PathBuf::from(DEFAULT_DATA_DIR));
    assert_eq!(config.memory_budget_bytes, DEFAULT_MEMORY_BUDGET_BYTES);
    assert_eq!(config.transport, HttpTransportConfig::default());
    assert_eq!(
        config.database_path(),
        Utf8PathBuf::from(DEFAULT_DATA_DIR).join("photorama.sqlite")
    );
    assert_eq!(
        config.cache_config().directory,
        Utf8PathBuf::from(DEFAULT_DATA_DIR).join("images")
    );
}

#[rstest]
fn explicit_options_are_applied() {
    let args = ServiceArgs {
        memory_budget_mb: Some(8),
        timeout_secs: Some(5),
        user_agent: Some("photorama-test".to_owned()),
        data_dir: Some(Utf8PathBuf::from("/tmp/photos")),
        ..args_with_key()
    };
    let config = AppConfig::try_from(args).expect("config should build");
    assert_eq!(config.memory_budget_bytes, 8 * 1024 * 1024);
    assert_eq!(config.transport.timeout, Duration::from_secs(5));
    assert_eq!(config.transport.user_agent, "photorama-test");
    assert_eq!(config.cache_config().memory_budget_bytes, 8 * 1024 * 1024);
}

#[rstest]
fn zero_timeout_is_rejected() {
    let args = ServiceArgs {
        timeout_secs: Some(0),
        ..args_with_key()
    };
    match AppConfig::try_from(args).expect_err("zero timeout should error") {
        CliError::InvalidArgument { field, .. } => assert_eq!(field, ARG_TIMEOUT_SECS),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
fn zero_memory_budget_is_rejected() {
    let args = ServiceArgs {
        memory_budget_mb: Some(0),
        ..args_with_key()
    };
    match AppConfig::try_from(args).expect_err("zero budget should error") {
        CliError::InvalidArgument { field, .. } => assert_eq!(field, ARG_MEMORY_BUDGET_MB),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
fn environment_prefix_follows_the_service_command_name() {
    let name = ServiceArgs::command().get_name().to_owned();
    assert_eq!(name, SERVICE_COMMAND);
    let prefix = format!("PHOTORAMA_CMDS_{}_", name.to_uppercase());
    assert_eq!(ENV_API_KEY, format!("{prefix}API_KEY"));
}

#[rstest]
fn unusable_endpoint_is_reported_when_building_the_client() {
    let args = ServiceArgs {
        endpoint: Some("not a url".to_owned()),
        ..args_with_key()
    };
    let config = AppConfig::try_from(args).expect("config should build");
    assert!(matches!(
        config.flickr_api(),
        Err(CliError::FlickrConfig(_))
    ));
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "timeout_secs": "soon" }));
    match config_from_layers_for_test(composer.layers()) {
        Err(CliError::Configuration(_)) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honour_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "api_key": "from-file",
            "data_dir": "/srv/from-file",
            "memory_budget_mb": 16,
        }),
        None,
    );
    composer.push_environment(json!({
        "api_key": "from-env",
        "data_dir": "/srv/from-env",
    }));
    composer.push_cli(json!({ "data_dir": "/srv/from-cli" }));

    let config = config_from_layers_for_test(composer.layers()).expect("merged config");
    assert_eq!(config.api_key, "from-env");
    assert_eq!(config.data_dir, Utf8PathBuf::from("/srv/from-cli"));
    assert_eq!(config.memory_budget_bytes, 16 * 1024 * 1024);
}

#[rstest]
fn global_flags_parse_around_subcommands() {
    let cli = Cli::try_parse_from([
        "photorama",
        "--api-key",
        "k3y",
        "list",
        "--favorites",
        "--json",
    ])
    .expect("arguments parse");
    assert!(cli.json);
    assert_eq!(cli.service.api_key.as_deref(), Some("k3y"));
    assert!(matches!(
        cli.command,
        Command::List {
            favorites: true,
            tag: None
        }
    ));
}
