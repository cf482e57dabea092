use clap::App;
use clap::Arg;
use clap::ArgMatches;

pub fn init() -> ArgMatches<'static> {
    app().get_matches()
}

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn app() -> App<'static, 'static> {
    App::new("Tab Bridge")
        .version(VERSION)
        .name("tab-bridge")
        .author("Austin Jones <implAustin@gmail.com>")
        .about("A native messaging host which lets launchers list and switch browser tabs.")
        .after_help(
            "The browser starts tab-bridge, and speaks to it over stdin/stdout.  \
            Launchers connect to the unix socket at <runtime dir>/native-app.<pid>.sock, \
            and send one of `count`, `list`, or `select <tab id>`.",
        )
        .arg(
            Arg::with_name("LOG")
                .long("log")
                .required(false)
                .takes_value(true)
                .possible_values(&["trace", "debug", "info", "warn", "error", "off"])
                .help("Sets the log level.  Logs are written to stderr."),
        )
        .arg(
            Arg::with_name("RUNTIME-DIR")
                .long("_runtime-dir")
                .required(false)
                .hidden(true)
                .takes_value(true)
                .help("Overrides the directory the socket is created in"),
        )
        .arg(
            Arg::with_name("ORIGIN")
                .help("Arguments passed by the browser, such as the calling extension's origin")
                .required(false)
                .multiple(true)
                .allow_hyphen_values(true)
                .value_name("ORIGIN")
                .index(1),
        )
}
