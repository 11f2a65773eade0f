// Domain layer: core models, response payloads and ports (interfaces).

pub mod model;
pub mod ports;
pub mod response;
