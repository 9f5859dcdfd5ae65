//! Sound synchronization demo
//!
//! Drives two game states that share one in-memory audio backend: a menu
//! with looping music and a level with a few positional effects. Sounds are
//! started, paused and removed over a handful of ticks, the states are
//! swapped back and forth, and the backend's bookkeeping is logged.
//!
//! Usage: `sound_demo [config.toml|config.ron]`

use std::cell::RefCell;
use std::rc::Rc;

use sound_engine::core::{ApplicationConfig, Config, ConfigError, SoundConfig};
use sound_engine::ecs::components::{SceneNodeComponent, SoundSourceComponent};
use sound_engine::ecs::systems::{SceneNodeSystem, SoundSourceSystem};
use sound_engine::ecs::Entity;
use sound_engine::foundation::logging;
use sound_engine::audio::MemoryBackend;
use sound_engine::{Engine, EngineError, GameState};

type SharedBackend = Rc<RefCell<MemoryBackend>>;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Entity {0} lost its sound source")]
    MissingSource(Entity),
}

fn main() {
    if let Err(error) = run() {
        log::error!("{}", error);
        eprintln!("sound_demo: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => ApplicationConfig::load_from_file(&path)?,
        None => ApplicationConfig::default(),
    };
    config.validate()?;
    logging::init_with_filter(&config.engine.log_level);
    log::info!("Starting sound demo at {} Hz", config.engine.tick_rate_hz);

    let backend: SharedBackend = Rc::new(RefCell::new(MemoryBackend::new()));
    let mut engine = Engine::new(config.engine.clone());

    let (menu, _) = build_state("menu", &backend, &config.sound, &[("music", "menu_theme.ogg", true)]);
    let (level, level_entities) = build_state(
        "level",
        &backend,
        &config.sound,
        &[("engine", "engine_hum.ogg", true), ("laser", "laser.wav", false)],
    );
    engine.add_state(menu)?;
    engine.add_state(level)?;

    let delta_ms = 1000 / config.engine.tick_rate_hz.max(1);

    engine.switch_to("menu")?;
    engine.tick(delta_ms)?;
    report(&engine, &backend);

    engine.switch_to("level")?;
    engine.tick(delta_ms)?;
    report(&engine, &backend);

    // Pause the hum, fire the laser and drop it again on the next tick.
    let ship = level_entities[0];
    with_source(&mut engine, ship, |source| {
        if let Some(sound) = source.sound_mut("engine") {
            sound.pause();
        }
        if let Some(sound) = source.sound_mut("laser") {
            sound.set_volume(0.6).play();
        }
    })?;
    engine.tick(delta_ms)?;
    report(&engine, &backend);

    with_source(&mut engine, ship, |source| {
        source.remove_sound("laser");
        source.set_relative_to_listener(false);
    })?;
    engine.tick(delta_ms)?;
    report(&engine, &backend);

    engine.switch_to("menu")?;
    engine.tick(delta_ms)?;
    report(&engine, &backend);

    engine.shutdown();
    let stats = backend.borrow().stats();
    log::info!(
        "Backend totals: {} created, {} destroyed, {} failed, {} leaked",
        stats.created,
        stats.destroyed,
        stats.failed_creations,
        stats.leaked_on_unbind
    );
    Ok(())
}

/// Build a state with a single entity carrying the given sounds
fn build_state(
    name: &str,
    backend: &SharedBackend,
    sound_config: &SoundConfig,
    sounds: &[(&str, &str, bool)],
) -> (GameState, Vec<Entity>) {
    let mut state = GameState::new(name)
        .with_system(SceneNodeSystem::new())
        .with_system(SoundSourceSystem::with_config(Rc::clone(backend), *sound_config));

    let world = state.world_mut();
    let entity = world.create_entity();
    let mut source = SoundSourceComponent::new();
    for (sound_name, filename, looped) in sounds {
        let sound = source.add_sound(*sound_name, *filename).set_looped(*looped);
        if *looped {
            sound.play();
        }
    }
    world.add_component(entity, SceneNodeComponent::new());
    world.add_component(entity, source);

    (state, vec![entity])
}

fn with_source(
    engine: &mut Engine,
    entity: Entity,
    edit: impl FnOnce(&mut SoundSourceComponent),
) -> Result<(), DemoError> {
    let state = engine.current_state_mut().ok_or(EngineError::NoCurrentState)?;
    let source = state
        .world_mut()
        .get_component_mut::<SoundSourceComponent>(entity)
        .ok_or(DemoError::MissingSource(entity))?;
    edit(source);
    Ok(())
}

fn report(engine: &Engine, backend: &SharedBackend) {
    let state = engine.current_state_name().unwrap_or("<none>");
    let backend = backend.borrow();
    log::info!("[{}] {} live sounds", state, backend.live_count());
    for (handle, sound) in backend.live_sounds() {
        log::info!(
            "  {} '{}' ({}) state={:?} volume={:.2} relative={}",
            handle,
            sound.name,
            sound.filename,
            sound.state,
            sound.volume,
            sound.relative_to_listener
        );
    }
}
