/// Which engine runs a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    /// Walk a tree of closures built from the routes, memoizing source
    /// sub-paths per call.
    Interpreted,
    /// Assemble one expression tree, lower it once, call the result.
    #[default]
    Compiled,
}

/// Options shared by every context of a [`Mapper`](crate::Mapper).
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Separator between path segments in remap paths (default: `/`)
    pub separator: char,
    /// Skip assignments whose value equals the destination type's default
    /// (default: false). Resolvers still run.
    pub ignore_default_values: bool,
    /// Default-construct null nested destination objects before
    /// populating their members (default: true)
    pub initialize_null_values: bool,
    /// Compile nested element contexts as soon as a collection resolver
    /// needs them (default: false)
    pub compile_inner_maps: bool,
    /// Engine used by `map` and `map_into` (default: compiled)
    pub engine: Engine,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            separator: '/',
            ignore_default_values: false,
            initialize_null_values: true,
            compile_inner_maps: false,
            engine: Engine::Compiled,
        }
    }
}

impl MapperConfig {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `separator` between path segments.
    pub const fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Skip assigning default values.
    pub const fn ignore_default_values(mut self, ignore: bool) -> Self {
        self.ignore_default_values = ignore;
        self
    }

    /// Default-construct null nested destination objects.
    pub const fn initialize_null_values(mut self, initialize: bool) -> Self {
        self.initialize_null_values = initialize;
        self
    }

    /// Compile nested element contexts eagerly.
    pub const fn compile_inner_maps(mut self, compile: bool) -> Self {
        self.compile_inner_maps = compile;
        self
    }

    /// Run mappings with `engine`.
    pub const fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }
}
