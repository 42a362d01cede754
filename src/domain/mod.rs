// Domain layer: device payload models and the ports the client and harnesses are written against.

pub mod model;
pub mod ports;
