/*!
Here we go!
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Router,
    routing::{get, get_service, post},
};
use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tokio::sync::RwLock;
use tower_http::services::fs::ServeDir;

use quad::config;
use quad::inter;

async fn catchall_error_handler(e: std::io::Error) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Unhandled internal error: {}", &e)
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("quad")
        .build();
    TermLogger::init(
        quad::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let cfg_path = std::env::var("QUAD_CONFIG")
        .unwrap_or_else(|_| "quad.toml".to_owned());
    let cfg = config::Cfg::load(&cfg_path).unwrap();
    log::info!("Configuration:\n{:#?}", &cfg);

    inter::init(&cfg.template_dir).unwrap();

    let glob = config::load_configuration(&cfg).unwrap();
    let glob = Arc::new(RwLock::new(glob));

    let serve_static = get_service(ServeDir::new(&cfg.static_dir))
        .handle_error(catchall_error_handler);

    let app = Router::new()
        .route("/", get(inter::login::home))
        .route("/login-page", get(inter::login::login_page))
        .route("/login", post(inter::login::login))
        .route("/register-page", get(inter::login::register_page))
        .route("/register", post(inter::login::register))
        .route("/logout", get(inter::login::logout))
        .route("/admin-dashboard", get(inter::admin::dashboard))
        .route("/admin-dashboard/users", post(inter::admin::add_user))
        .route("/admin-dashboard/users/:id/delete", post(inter::admin::delete_user))
        .route("/admin-dashboard/courses", post(inter::admin::add_course))
        .route("/admin-dashboard/courses/:id/delete", post(inter::admin::delete_course))
        .route("/admin-dashboard/report.csv", get(inter::admin::report_csv))
        .route("/faculty-dashboard", get(inter::faculty::dashboard))
        .route("/faculty-dashboard/attendance", post(inter::faculty::save_attendance))
        .route("/faculty-dashboard/assignments/:id/grade", post(inter::faculty::save_grade))
        .route("/student-dashboard", get(inter::student::dashboard))
        .route("/student-dashboard/submit", post(inter::student::submit_assignment))
        .nest_service("/static", serve_static)
        .layer(Extension(glob));

    log::info!("Listening on {}", &cfg.addr);

    axum::Server::bind(&cfg.addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
