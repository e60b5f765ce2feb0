pub(crate) mod compositor;
pub(crate) mod raster;
pub(crate) mod rasterize;
pub(crate) mod surface_pool;
pub(crate) mod warning;
