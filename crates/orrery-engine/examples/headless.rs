//! Headless demo: runs the engine for a couple of seconds with null
//! collaborators, spawning drifters and printing frame statistics.
//!
//! ```sh
//! cargo run --example headless
//! RUST_LOG=debug cargo run --example headless
//! ```

use std::sync::Arc;
use std::time::Duration;

use orrery_engine::prelude::*;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = EngineSettings {
        ticks_per_second: 60.0,
        target_frame_rate: 60.0,
        ..EngineSettings::default()
    };
    let loader = MemoryAssetLoader::new().with_image("demo/drifter.png", Vec2::new(24.0, 24.0));
    let engine = Arc::new(Engine::new(
        settings,
        Box::new(NullRenderer),
        Box::new(NullInput),
        Box::new(loader),
    )?);

    engine.register_sprite_factory(
        "drifter",
        Box::new(|ctx| {
            let mut sprite = DrifterSprite::new(ctx.sprites.allocate_id());
            sprite.base_mut().set_tag("drifter");
            sprite.base_mut().set_image(ctx.assets.image("demo/drifter.png")?);
            sprite.base_mut().set_speed(2.0);
            Ok(Box::new(sprite) as Box<dyn Sprite>)
        }),
    )?;
    engine.on_initialized(|| tracing::info!("demo scene ready"));

    engine.start()?;
    engine.show_player(engine.display().center());
    for _ in 0..20 {
        engine.spawn("drifter")?;
    }

    std::thread::sleep(Duration::from_secs(2));
    let snapshot = engine.with_world_clock(|| engine.diagnostics());
    tracing::info!(%snapshot, "after two seconds");

    engine.shutdown();
    Ok(())
}
