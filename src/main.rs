use clap::Parser;
use nannou::prelude::*;
use std::path::PathBuf;

mod backend;
mod calculation;
mod config;
mod error;
mod logging;
mod model;
mod playback;
mod render_drawing;
mod spectrum;
mod ui;

use backend::RodioBackend;
use config::{Cli, Settings};
use model::{Model, Player};

fn main() {
    nannou::app(model).update(update).exit(exit).run();
}

fn model(app: &App) -> Model {
    let cli = Cli::parse();
    let (mut settings, config_error) = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    settings.apply_cli(&cli);

    let log_guard = match logging::init(&settings.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {}", e);
            None
        }
    };
    if let Some(e) = config_error {
        tracing::warn!("using default settings: {}", e);
    }

    let window = app
        .new_window()
        .title("SoundScape")
        .size(settings.window.width, settings.window.height)
        .view(view)
        .mouse_pressed(mouse_pressed)
        .key_pressed(key_pressed)
        .dropped_file(dropped_file)
        .resized(resized)
        .build();
    if let Err(e) = window {
        tracing::error!("failed to create window: {:?}", e);
        std::process::exit(1);
    }

    let backend = match RodioBackend::spawn() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("failed to start audio backend: {}", e);
            std::process::exit(1);
        }
    };

    let mut player = Player::new(backend, settings.analyser, settings.draw, settings.volume);
    if cli.file.is_some() {
        player.open(cli.file.as_deref());
    }
    tracing::info!(
        style = ?player.draw_config.style,
        bins = player.sampler.bin_count(),
        "visualizer ready"
    );

    Model::new(player, log_guard)
}

fn update(_app: &App, model: &mut Model, _update: Update) {
    model.player.tick();
}

fn mouse_pressed(app: &App, model: &mut Model, button: MouseButton) {
    if button != MouseButton::Left {
        return;
    }
    let layout = ui::ControlLayout::new(app.window_rect());
    if let Some(action) = layout.hit_test(app.mouse.position()) {
        tracing::debug!(?action, "control clicked");
        model.player.apply(action);
    }
}

fn key_pressed(_app: &App, model: &mut Model, key: Key) {
    if let Some(shortcut) = model::shortcut(key) {
        model.player.apply_shortcut(shortcut);
    }
}

fn dropped_file(_app: &App, model: &mut Model, path: PathBuf) {
    model.player.open(Some(&path));
}

fn resized(_app: &App, _model: &mut Model, size: Vec2) {
    tracing::debug!(width = size.x, height = size.y, "window resized");
}

fn view(app: &App, model: &Model, frame: Frame) {
    render_drawing::draw_on_window(
        app,
        frame,
        model.player.snapshot(),
        &model.player.draw_config,
        model.player.state(),
    );
}

fn exit(_app: &App, mut model: Model) {
    model.player.teardown();
    tracing::info!("shutting down");
    // dropping the backend joins the audio thread
    drop(model);
}
