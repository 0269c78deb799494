use axum::Router;

/// A service module that contributes HTTP routes.
///
/// Each business module (receiving, ...) implements this trait to register
/// its API endpoints. The server binary collects all modules and nests
/// their routes under `/{name}`.
pub trait Module: Send + Sync {
    /// Module name, used for logging and the route prefix.
    fn name(&self) -> &str;

    /// Return the module's routes. State is already applied.
    fn routes(&self) -> Router;
}
