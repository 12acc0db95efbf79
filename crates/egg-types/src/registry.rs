//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every storage backend module exposes a `Registry` struct implementing this
/// trait so the service can look it up by the name used in configuration,
/// for example `storage.implementations.postgres`.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
