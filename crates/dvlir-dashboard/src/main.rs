mod bootstrap;
mod views;

use anyhow::Result;
use meter_core::settings::Settings;
use meter_core::time_utils::capture_stamp_now;
use meter_ui::app::{App, DashboardOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(
        &settings.log_level,
        &bootstrap::LogTarget::for_settings(&settings),
    )?;

    tracing::info!("DvLIR dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Inputs: {}, Theme: {}",
        settings.view,
        bootstrap::display_inputs(&settings.files),
        settings.theme
    );

    let sources = bootstrap::resolve_sources(&settings.files)?;
    let mut session = bootstrap::build_session(&settings, &sources)?;

    match settings.view.as_str() {
        "dashboard" => {
            let options = DashboardOptions {
                export: views::export_options(&settings)?,
                plot: views::plot_request(&settings)?,
                output_dir: settings.output_dir(),
            };
            let app = App::new(&settings.theme, session, options);

            // The loop exits on 'q' / Ctrl+C inside the TUI. Ctrl+C is also
            // caught at the OS level for signals that arrive outside raw mode.
            tokio::select! {
                result = app.run_dashboard() => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down");
                }
            }
        }

        "summary" => {
            if settings.json {
                println!("{}", serde_json::to_string_pretty(&views::summary_json(&session)?)?);
            } else {
                println!("{}", views::summary_text(&session)?);
            }
        }

        "export" => {
            let written = views::run_export(&settings, &mut session, &capture_stamp_now())?;
            for path in written {
                println!("{}", path.display());
            }
        }

        unknown => {
            eprintln!("Unknown view mode: {}", unknown);
        }
    }

    Ok(())
}
