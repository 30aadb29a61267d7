//! Well-known URIs of the meta model

// Meta types
pub const META_TYPE: &str = "dm4.core.meta_type";
pub const TOPIC_TYPE: &str = "dm4.core.topic_type";
pub const ASSOC_TYPE: &str = "dm4.core.assoc_type";
pub const DATA_TYPE: &str = "dm4.core.data_type";
pub const ROLE_TYPE: &str = "dm4.core.role_type";
pub const CARDINALITY: &str = "dm4.core.cardinality";
pub const INDEX_MODE: &str = "dm4.core.index_mode";

// Data types
pub const TEXT: &str = "dm4.core.text";
pub const HTML: &str = "dm4.core.html";
pub const NUMBER: &str = "dm4.core.number";
pub const BOOLEAN: &str = "dm4.core.boolean";
pub const COMPOSITE: &str = "dm4.core.composite";

pub const DATA_TYPES: [&str; 5] = [TEXT, HTML, NUMBER, BOOLEAN, COMPOSITE];

// Cardinalities
pub const ONE: &str = "dm4.core.one";
pub const MANY: &str = "dm4.core.many";

// Index modes
pub const INDEX_OFF: &str = "dm4.core.off";
pub const INDEX_KEY: &str = "dm4.core.key";
pub const INDEX_FULLTEXT: &str = "dm4.core.fulltext";
pub const INDEX_FULLTEXT_KEY: &str = "dm4.core.fulltext_key";

// Association types
pub const COMPOSITION: &str = "dm4.core.composition";
pub const AGGREGATION: &str = "dm4.core.aggregation";
pub const COMPOSITION_DEF: &str = "dm4.core.composition_def";
pub const AGGREGATION_DEF: &str = "dm4.core.aggregation_def";

// Role types
pub const PARENT: &str = "dm4.core.parent";
pub const CHILD: &str = "dm4.core.child";
pub const PARENT_TYPE: &str = "dm4.core.parent_type";
pub const CHILD_TYPE: &str = "dm4.core.child_type";
pub const TYPE: &str = "dm4.core.type";
pub const DEFAULT: &str = "dm4.core.default";
pub const ASSOC_DEF: &str = "dm4.core.assoc_def";
pub const PARENT_CARDINALITY: &str = "dm4.core.parent_cardinality";
pub const CHILD_CARDINALITY: &str = "dm4.core.child_cardinality";
pub const CUSTOM_ASSOC_TYPE: &str = "dm4.core.custom_assoc_type";
pub const INCLUDE_IN_LABEL: &str = "dm4.core.include_in_label";
pub const CONFIGURABLE: &str = "dm4.core.configurable";
pub const VIEW_CONFIG: &str = "dm4.core.view_config";

pub const ROLE_TYPES: [&str; 13] = [
    PARENT,
    CHILD,
    PARENT_TYPE,
    CHILD_TYPE,
    TYPE,
    DEFAULT,
    ASSOC_DEF,
    PARENT_CARDINALITY,
    CHILD_CARDINALITY,
    CUSTOM_ASSOC_TYPE,
    INCLUDE_IN_LABEL,
    CONFIGURABLE,
    VIEW_CONFIG,
];
