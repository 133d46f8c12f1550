//! Pointmap Viewer - load a GLB model, orbit it, and annotate it with points

mod app;
mod markers;
mod model;
mod placement;
mod scene;
mod ui;

fn main() {
    app::run();
}
