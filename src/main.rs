use facesketch::{
    app::{self, App},
    config::Config,
    gui,
};

fn main() -> anyhow::Result<()> {
    facesketch::init_logger!();

    let config = Config::from_env()?;
    log::debug!("{config:?}");

    let (app, controls) = App::new(config)?;
    gui::run(app::TITLE, controls, move || app.run())
}
