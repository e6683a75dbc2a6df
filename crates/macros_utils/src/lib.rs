/// Generate a `routes` function registering the listed actix handlers.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
/// }
/// ```
///
/// expands to a `pub fn routes(cfg: &mut ServiceConfig)` suitable for
/// `App::configure`.
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $handler:path),+ $(,)?) => {
        pub fn routes(cfg: &mut ::actix_web::web::ServiceConfig) {
            $(cfg.service($handler);)+
        }
    };
}
