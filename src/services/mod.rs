pub mod classifier;
pub mod command_dispatcher;
pub mod detection_loop;
pub mod island;
pub mod maximization;
pub mod notifier;
pub mod thumbnail_resolver;
pub mod window_detector;
pub mod window_tracker;

pub use command_dispatcher::MediaCommandDispatcher;
pub use detection_loop::DetectionService;
pub use island::IslandPresenter;
pub use notifier::{Notifier, TracingListener};
pub use thumbnail_resolver::ThumbnailResolver;
pub use window_detector::create_window_provider;
pub use window_tracker::WindowTracker;
