use variant_annotation_cache::config::Config;
use variant_annotation_cache::build_rocket;

#[rocket::launch]
fn rocket() -> _ {
    env_logger::init();
    build_rocket(Config::from_environment())
}
