//! Controller configuration schema shown to the model when it builds views.

/// Simplified description of the controller configuration file.
pub const HMI_SCHEMA_DOC: &str = r#"
Controller configuration (simplified):

{
  "database": {
    "tags": {
      "<tagName>": {
        "arraydim": number,          // 1 unless the tag is an array
        "datatype": "Text" | "Number",
        "value": string | number,    // "" for Text, 0 for Number
        "config": {
          "persistent": boolean,     // false
          "historic": boolean,       // false
          "hidden": boolean,         // false
          "editable": boolean        // true
        },
        "comment": string
      }
    },
    "settings": { "persistanceUpdateTime": number, "maxDaysToLog": number }
  },
  "modules": [ { "id": string, "name": string, "type": string, "config": object } ],
  "hmi": {
    "views": [
      {
        "id": string,
        "name": string,
        "type": "view",
        "config": { "width": number, "height": number, "style": object, "sizeMode": "normal" | "zoom" },
        "components": [
          {
            "id": string,
            "viewId": string,            // id of the owning view
            "type": string,              // "label", "button", "numericInput", ...
            "comptName": string,
            "x": number, "y": number, "w": number, "h": number,
            "config": { "text"?: string, "tagName"?: string, "style"?: object }
          }
        ]
      }
    ],
    "general": {
      "defaultViewId": string | null,
      "mainView": string | null,
      "viewsTree": [ { "name": string, "type": "view", "id": string } ]
    }
  },
  "charts": [ { "id": string, "name": string, "series": [ { "tag": string, "color": string } ] } ]
}

Objects in proposed_changes.hmi.views must follow the view shape above.
proposed_changes.tags_to_add maps each new tag name to a tag definition
with the same fields as database.tags.
"#;
