use clap::builder::{BoolishValueParser, PossibleValue};
use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    Command,
};

// Settings that can also come from the configuration file have no clap
// default: `Config` needs to know whether they have been provided or not.
pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("config-path")
            .long("config-path")
            .value_name("CONFIG_PATH")
            .env("CONFIGPATH")
            .default_value(".")
            .help("Directory holding the config.yaml, config.yml or config.json file"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .env("SERVER_ADDRESS")
            .help("Bind against ADDRESS [default: 0.0.0.0]"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .env("SERVER_PORT")
            .value_parser(value_parser!(u16))
            .help("Listen on PORT [default: 8443]"),
        Arg::new("tls-enabled")
            .long("tls-enabled")
            .value_name("BOOL")
            .env("SERVER_TLS_ENABLED")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new())
            .help("Serve HTTPS instead of HTTP [default: false]"),
        Arg::new("tls-dir")
            .long("tls-dir")
            .value_name("TLS_DIR")
            .env("SERVER_TLS_DIR")
            .help("Directory holding the TLS certificate and key [default: /run/secrets/tls]"),
        Arg::new("tls-cert-file")
            .long("tls-cert-file")
            .value_name("CERT_FILE")
            .env("SERVER_TLS_CERTFILE")
            .help("Name of the PEM certificate file, relative to the TLS directory [default: tls.crt]"),
        Arg::new("tls-key-file")
            .long("tls-key-file")
            .value_name("KEY_FILE")
            .env("SERVER_TLS_KEYFILE")
            .help("Name of the PEM private key file, relative to the TLS directory [default: tls.key]"),
        Arg::new("default-allow-privilege-escalation")
            .long("default-allow-privilege-escalation")
            .value_name("BOOL")
            .env("APP_DEFAULT")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new())
            .help("Value given to allowPrivilegeEscalation when a container doesn't set it [default: false]"),
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
