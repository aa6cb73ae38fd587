// Domain layer: models and ports. Adapters implement the ports, core holds the pure logic.

pub mod model;
pub mod ports;
