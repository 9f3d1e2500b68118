// ============================================
// Planet Terrain - Точка входа
// ============================================
// planet-terrain [config.json]
// Уровень логов через RUST_LOG, например RUST_LOG=info

use planet_terrain::app::App;
use planet_terrain::TerrainConfig;

const CONFIG_FILE: &str = "terrain.json";

fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = TerrainConfig::load_or_default(&config_path);

    let mut app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Не удалось запустить: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = app.run() {
        log::error!("[SAVE] {}", e);
        std::process::exit(1);
    }
}
