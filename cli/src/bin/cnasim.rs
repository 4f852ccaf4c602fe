#[macro_use]
extern crate log;
fn main() {
    let matches = cnasim_cli::commands::command().get_matches();
    let level = match matches.get_count("verbose") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    if let Err(why) = cnasim_cli::pipeline::run(&matches) {
        error!("{}", why);
        std::process::exit(1);
    }
}
