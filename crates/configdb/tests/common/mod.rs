//! Hand-authored schema tables for the integration suite, shaped like the
//! output of the schema generator.
//!
//! Store 0 (the root store) layout, 17 bytes:
//!
//! | offset | property     | type            |
//! |--------|--------------|-----------------|
//! | 0      | simpleBool   | Boolean         |
//! | 1      | simpleInt    | Int16 [-5, 100] |
//! | 3      | simpleString | String          |
//! | 5      | simpleFloat  | Number          |
//! | 9      | color        | Enum            |
//! | 10     | intArray     | ArrayId         |
//! | 12     | stringArray  | ArrayId         |
//! | 14     | objectArray  | ArrayId         |
//! | 16     | nested       | Object          |
//!
//! Store 1 ("colors") holds a single union.

#![allow(dead_code)]

use configdb::{
    Database, DatabaseInfo, EnumInfo, EnumValues, Number, ObjectInfo, ObjectType, PropertyInfo,
    PropertyType, PropertyVariant,
};
use tempfile::TempDir;

pub const SIMPLE_FLOAT_DEFAULT: Number = Number::from_parts(31415927, -7);

static COLOR_ENUM: EnumInfo = EnumInfo {
    values: EnumValues::Strings(&["red", "green", "blue"]),
};

static INT_ARRAY: ObjectInfo = ObjectInfo {
    otype: ObjectType::Array,
    default_data: None,
    struct_size: 2,
    object_count: 0,
    property_count: 1,
    alias_count: 0,
    propinfo: &[PropertyInfo {
        ptype: PropertyType::Int32,
        name: "",
        offset: 0,
        variant: PropertyVariant::None,
    }],
};

static STRING_ARRAY: ObjectInfo = ObjectInfo {
    otype: ObjectType::Array,
    default_data: None,
    struct_size: 2,
    object_count: 0,
    property_count: 1,
    alias_count: 0,
    propinfo: &[PropertyInfo {
        ptype: PropertyType::String,
        name: "",
        offset: 0,
        variant: PropertyVariant::None,
    }],
};

static ARRAY_ITEM: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: None,
    struct_size: 6,
    object_count: 0,
    property_count: 2,
    alias_count: 0,
    propinfo: &[
        PropertyInfo {
            ptype: PropertyType::String,
            name: "name",
            offset: 0,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::Int32,
            name: "value",
            offset: 2,
            variant: PropertyVariant::None,
        },
    ],
};

static OBJECT_ARRAY: ObjectInfo = ObjectInfo {
    otype: ObjectType::ObjectArray,
    default_data: None,
    struct_size: 2,
    object_count: 1,
    property_count: 0,
    alias_count: 0,
    propinfo: &[PropertyInfo {
        ptype: PropertyType::Object,
        name: "",
        offset: 0,
        variant: PropertyVariant::Object(&ARRAY_ITEM),
    }],
};

static NESTED: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: None,
    struct_size: 1,
    object_count: 0,
    property_count: 1,
    alias_count: 0,
    propinfo: &[PropertyInfo {
        ptype: PropertyType::Boolean,
        name: "knownBool",
        offset: 0,
        variant: PropertyVariant::None,
    }],
};

const ROOT_SIZE: usize = 17;

const fn root_defaults() -> [u8; ROOT_SIZE] {
    let mut data = [0u8; ROOT_SIZE];
    // simpleInt = -1
    data[1] = 0xff;
    data[2] = 0xff;
    // simpleFloat = 3.1415927
    let float = SIMPLE_FLOAT_DEFAULT.to_bits().to_le_bytes();
    data[5] = float[0];
    data[6] = float[1];
    data[7] = float[2];
    data[8] = float[3];
    // color = green
    data[9] = 1;
    data
}

static ROOT_DEFAULTS: [u8; ROOT_SIZE] = root_defaults();

static ROOT: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: Some(&ROOT_DEFAULTS),
    struct_size: ROOT_SIZE as u32,
    object_count: 4,
    property_count: 5,
    alias_count: 1,
    propinfo: &[
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "intArray",
            offset: 10,
            variant: PropertyVariant::Object(&INT_ARRAY),
        },
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "stringArray",
            offset: 12,
            variant: PropertyVariant::Object(&STRING_ARRAY),
        },
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "objectArray",
            offset: 14,
            variant: PropertyVariant::Object(&OBJECT_ARRAY),
        },
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "nested",
            offset: 16,
            variant: PropertyVariant::Object(&NESTED),
        },
        PropertyInfo {
            ptype: PropertyType::Boolean,
            name: "simpleBool",
            offset: 0,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::Int16,
            name: "simpleInt",
            offset: 1,
            variant: PropertyVariant::IntRange { min: -5, max: 100 },
        },
        PropertyInfo {
            ptype: PropertyType::String,
            name: "simpleString",
            offset: 3,
            variant: PropertyVariant::DefaultString("donkey"),
        },
        PropertyInfo {
            ptype: PropertyType::Number,
            name: "simpleFloat",
            offset: 5,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::Enum,
            name: "color",
            offset: 9,
            variant: PropertyVariant::Enum(&COLOR_ENUM),
        },
        // Alias: "simpleInteger" redirects to simpleInt (combined index 5).
        PropertyInfo {
            ptype: PropertyType::Alias,
            name: "simpleInteger",
            offset: 5,
            variant: PropertyVariant::None,
        },
    ],
};

static RGB: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: None,
    struct_size: 3,
    object_count: 0,
    property_count: 3,
    alias_count: 0,
    propinfo: &[
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "red",
            offset: 0,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "green",
            offset: 1,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "blue",
            offset: 2,
            variant: PropertyVariant::None,
        },
    ],
};

static HSV: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: None,
    struct_size: 3,
    object_count: 0,
    property_count: 3,
    alias_count: 0,
    propinfo: &[
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "hue",
            offset: 0,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "saturation",
            offset: 1,
            variant: PropertyVariant::None,
        },
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "value",
            offset: 2,
            variant: PropertyVariant::None,
        },
    ],
};

/// Tag byte at offset 0, variant storage at offset 1.
static COLOR_UNION: ObjectInfo = ObjectInfo {
    otype: ObjectType::Union,
    default_data: None,
    struct_size: 4,
    object_count: 2,
    property_count: 1,
    alias_count: 0,
    propinfo: &[
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "rgb",
            offset: 1,
            variant: PropertyVariant::Object(&RGB),
        },
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "hsv",
            offset: 1,
            variant: PropertyVariant::Object(&HSV),
        },
        PropertyInfo {
            ptype: PropertyType::UInt8,
            name: "",
            offset: 0,
            variant: PropertyVariant::None,
        },
    ],
};

static COLORS_ROOT: ObjectInfo = ObjectInfo {
    otype: ObjectType::Object,
    default_data: None,
    struct_size: 4,
    object_count: 1,
    property_count: 0,
    alias_count: 0,
    propinfo: &[PropertyInfo {
        ptype: PropertyType::Object,
        name: "color1",
        offset: 0,
        variant: PropertyVariant::Object(&COLOR_UNION),
    }],
};

pub static TEST_DB: DatabaseInfo = DatabaseInfo {
    name: "test-config",
    stores: &[
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "",
            offset: 0,
            variant: PropertyVariant::Object(&ROOT),
        },
        PropertyInfo {
            ptype: PropertyType::Object,
            name: "colors",
            offset: 0,
            variant: PropertyVariant::Object(&COLORS_ROOT),
        },
    ],
};

/// Fresh database over a temp directory; keep the guard alive for the test.
pub fn open_database() -> (TempDir, Database) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::new(dir.path(), &TEST_DB);
    (dir, db)
}

/// Compact JSON of the whole database, for state comparison.
pub fn export_compact(db: &Database) -> String {
    let mut out = Vec::new();
    db.format()
        .export_database(db, &mut out, &Default::default())
        .expect("export");
    String::from_utf8(out).expect("utf8 export")
}
