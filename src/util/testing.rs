//! Shared test setup: logging and small orchard fixtures.

use std::env;
use std::sync::{Arc, Once};

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::Settings;
use crate::infrastructure::traits::{InMemoryRepository, MemberCollaborator};
use crate::infrastructure::ServiceContainer;

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Settings for a small in-memory orchard.
pub fn test_settings() -> Settings {
    Settings {
        state_file: "orchard.json".into(),
        root_name: "New Circle Movement".to_string(),
        base_resource: "fruit".to_string(),
        root_resource: "circle fruit".to_string(),
        monthly_fruit_basis: 100,
        max_members: 1000,
    }
}

/// Services over a fresh in-memory orchard.
pub fn in_memory_container(
    collaborator: Arc<dyn MemberCollaborator>,
) -> (ServiceContainer, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    let container = ServiceContainer::with_repository(test_settings(), repo.clone(), collaborator)
        .unwrap_or_else(|e| panic!("in-memory orchard: {}", e));
    (container, repo)
}
