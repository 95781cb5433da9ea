//! Default configuration values

/// Recognized metadata description filenames
pub const METADATA_FILENAMES: [&str; 2] = ["meta.yaml", "meta.yml"];

/// Meta-package naming convention
pub const META_PACKAGE_PATTERN: &str = r"^ska3-\S+$";

/// Markers requiring the version to be derived from source control
pub const VERSION_MARKERS: [&str; 2] = ["SKA_PKG_VERSION", "GIT_DESCRIBE_TAG"];

/// Template parameter naming the source checkout root
pub const SRC_DIR_PARAM: &str = "SKA_TOP_SRC_DIR";

/// Environment variable carrying the derived version into the build tool
pub const PKG_VERSION_ENV: &str = "SKA_PKG_VERSION";

/// Default build-order filename inside the package definitions root
pub const BUILD_ORDER_FILENAME: &str = "build_order.txt";

/// Primary branch candidates, in preference order
pub const PRIMARY_BRANCHES: [&str; 2] = ["master", "main"];

/// Default package definitions directory
pub const DEFAULT_PKG_DEFS_DIR: &str = "pkg_defs";

/// Default build tool executable
pub const DEFAULT_CONDA: &str = "conda";

/// Default interpreter used for version derivation
pub const DEFAULT_PYTHON: &str = "python";

/// Default python version pin passed to the build tool
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";

/// Default numpy version pin passed to the build tool
pub const DEFAULT_NUMPY_VERSION: &str = "1.26";

/// Default perl version pin passed to the build tool
pub const DEFAULT_PERL_VERSION: &str = "5.26.2";

/// Default build output root
pub const DEFAULT_BUILD_ROOT: &str = "builds";

/// Source checkout root when none is configured, relative to the working
/// directory for `list` and to the run's staging area for `build`
pub const DEFAULT_SRC_DIR: &str = "src";

/// Host whose https home URLs are rewritten to ssh clone URLs
pub const GITHUB_HOST: &str = "github.com";
