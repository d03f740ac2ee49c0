//! Recursive string visitors over opaque YAML values, used for
//! token expansion in `x-*` blocks and untyped top-level sections.

use serde_yaml_ng::Value;

use crate::sections::YamlMap;

pub fn visit_value_strings_mut(
  value: &mut Value,
  visit: &mut impl FnMut(&mut String),
) {
  match value {
    Value::String(s) => visit(s),
    Value::Sequence(items) => {
      for item in items {
        visit_value_strings_mut(item, visit);
      }
    }
    Value::Mapping(map) => {
      let entries = std::mem::take(map);
      for (mut key, mut entry) in entries {
        visit_value_strings_mut(&mut key, visit);
        visit_value_strings_mut(&mut entry, visit);
        map.insert(key, entry);
      }
    }
    Value::Tagged(tagged) => {
      visit_value_strings_mut(&mut tagged.value, visit);
    }
    Value::Null | Value::Bool(_) | Value::Number(_) => {}
  }
}

pub fn visit_yaml_map_strings_mut(
  map: &mut YamlMap,
  visit: &mut impl FnMut(&mut String),
) {
  let entries = std::mem::take(map);
  for (mut key, mut value) in entries {
    visit(&mut key);
    visit_value_strings_mut(&mut value, visit);
    map.insert(key, value);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn visits_nested_strings_and_keys() {
    let mut value: Value = serde_yaml_ng::from_str(
      "a:\n  b: [x, y]\n  c: 1\nd: z\n",
    )
    .unwrap();
    let mut seen = Vec::new();
    visit_value_strings_mut(&mut value, &mut |s| {
      seen.push(s.clone())
    });
    assert!(seen.contains(&"x".to_string()));
    assert!(seen.contains(&"z".to_string()));
    assert!(seen.contains(&"a".to_string()));
  }
}
