mod poll;
mod stats;
mod submit;
pub mod types;

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![submit::submit, poll::poll, stats::health, stats::statistics]
}
