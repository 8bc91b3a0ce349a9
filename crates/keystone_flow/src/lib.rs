//! # KEYSTONE Flow
//!
//! Scripted flow built on the core runtime.
//!
//! ## Modules
//!
//! - [`sequencer`] - resumable list of asynchronous steps
//! - [`group`] - group membership component and queries
//! - [`scene`] - scene construction and teardown from asset data
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystone_flow::{Sequencer, SequencerOptions};
//!
//! let mut intro = Sequencer::new(SequencerOptions::default());
//! intro
//!     .add(|| scenes.build("intro"))
//!     .delay(Duration::from_millis(500))
//!     .label("blink")
//!     .add(|| toggle_cursor())
//!     .goto_if("blink", move || !skipped.load(Ordering::Relaxed))?;
//! intro.run().await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod group;
pub mod scene;
pub mod sequencer;

pub use group::{query_group, Group, GROUP_KIND};
pub use scene::{
    EntityDef, SceneBuilder, SceneDef, SceneError, SceneEvent, CURRENT_SCENE_KEY, SCENE_BUILT,
    SCENE_UNLOADED,
};
pub use sequencer::{
    infer_delay, Sequencer, SequencerError, SequencerOptions, SequencerResult, SequencerState,
};
