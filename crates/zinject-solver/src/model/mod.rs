//! Feed, requirement and selection data structures.

mod architecture;
mod element;
mod feed;
mod preferences;
mod requirements;
mod selections;
mod uri;

/// Default command for running an implementation
pub const COMMAND_RUN: &str = "run";

/// Default command for building a source implementation
pub const COMMAND_COMPILE: &str = "compile";

pub use architecture::{Architecture, Cpu, Os};
pub use element::{
    Binding, Command, Dependency, EnvironmentBinding, EnvironmentMode, ExecutableBinding,
    GenericBinding, Importance, OverlayBinding, Restriction, Runner, ZEROINSTALL_DISTRIBUTION,
};
pub use feed::{Feed, FeedReference, Implementation, ManifestDigest, NativePackage, PackageImplementation};
pub use preferences::{
    DirectoryPreferences, FeedPreferences, ImplementationPreferences, InMemoryPreferences,
    InterfacePreferences, PreferencesProvider,
};
pub use requirements::Requirements;
pub use selections::{ImplementationSelection, Selections};
pub use uri::FeedUri;
