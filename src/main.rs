// IntelliClaim Dashboard - Main Entry Point
// Native Rust GUI for submitting insurance queries and watching the agents work

use eframe::egui;
use intelliclaim_dashboard::client::RealtimeClient;
use intelliclaim_dashboard::config::Config;
use intelliclaim_dashboard::error::ClientError;
use intelliclaim_dashboard::state::{Store, Subscription};
use intelliclaim_dashboard::ui::{render_app_layout, ActivityPanel, QueryForm};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

/// How long closing the window waits for the channel to say goodbye
const CHANNEL_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let runtime = Runtime::new()?;
    let store = Store::with_activity_capacity(config.ui.activity_log_lines);
    let mut client = RealtimeClient::new(config, store.clone(), runtime.handle().clone())?;
    client.probe_health()?;
    client.connect()?;

    // Configure window options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("IntelliClaim Dashboard")
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "IntelliClaim Dashboard",
        options,
        Box::new(move |cc| {
            let app = DashboardApp::new(&cc.egui_ctx, store, client, runtime);
            Box::new(app)
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))?;

    info!("Dashboard closed");
    Ok(())
}

/// Main application struct
/// Owns the store, the realtime client, and the view-local state
struct DashboardApp {
    store: Store,
    client: RealtimeClient,
    /// Uncommitted query text
    form: QueryForm,
    activity: ActivityPanel,
    /// Repaint trigger for store changes made off the GUI thread
    _repaint: Subscription,
    /// Declared last so the client shuts down before the runtime
    _runtime: Runtime,
}

impl DashboardApp {
    fn new(ctx: &egui::Context, store: Store, client: RealtimeClient, runtime: Runtime) -> Self {
        let repaint_ctx = ctx.clone();
        let repaint = store.subscribe(move |_| repaint_ctx.request_repaint());
        Self {
            store,
            client,
            form: QueryForm::new(),
            activity: ActivityPanel::new(),
            _repaint: repaint,
            _runtime: runtime,
        }
    }

    fn submit(&self, query: &str) {
        match self.client.process_query(query) {
            // The task writes its outcome into the store
            Ok(_task) => {}
            Err(ClientError::RunInProgress) => {
                warn!("Ignoring submission while a query is running");
            }
            Err(e) => {
                warn!(error = %e, "Could not submit query");
                self.store.record(format!("Could not submit query: {}", e));
            }
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let run = self.store.snapshot();
        let channel = self.store.channel_status();
        if let Some(query) = render_app_layout(
            ctx,
            &run,
            channel,
            &mut self.form,
            &mut self.activity,
            &self.store,
        ) {
            self.submit(&query);
        }
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        // Runs before the runtime is dropped, so the close frame goes out
        self.client.disconnect_and_wait(CHANNEL_CLOSE_TIMEOUT);
    }
}
