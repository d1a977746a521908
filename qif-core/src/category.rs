use std::rc::Rc;

use typed_builder::TypedBuilder;

use super::line::LineValue;
use super::line_types::{CategoryLine, ClassLine};
use super::record::Record;

/// Separator between the levels of a category name.
pub const CATEGORY_SEPARATOR: char = ':';

/// An income or expense category. Subcategories carry their full path,
/// e.g. `Shopping:Food`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct QifCategory {
    #[builder(setter(into))]
    pub name: String,

    #[builder(default)]
    pub description: Option<String>,

    #[builder(default)]
    pub income: bool,

    #[builder(default)]
    pub tax_related: bool,
}

impl QifCategory {
    /// Name of the enclosing category, if this is a subcategory.
    pub fn parent_name(&self) -> Option<&str> {
        self.name
            .rsplit_once(CATEGORY_SEPARATOR)
            .map(|(parent, _)| parent)
    }

    /// Last level of the category path.
    pub fn short_name(&self) -> &str {
        self.name
            .rsplit_once(CATEGORY_SEPARATOR)
            .map(|(_, short)| short)
            .unwrap_or(&self.name)
    }

    pub fn to_record(&self) -> Record<CategoryLine> {
        let mut record = Record::new();
        record.push(CategoryLine::Name, LineValue::Text(self.name.clone()));
        if let Some(description) = &self.description {
            record.push(CategoryLine::Description, LineValue::Text(description.clone()));
        }
        if self.tax_related {
            record.push(CategoryLine::Tax, LineValue::Flag);
        }
        if self.income {
            record.push(CategoryLine::Income, LineValue::Flag);
        } else {
            record.push(CategoryLine::Expense, LineValue::Flag);
        }
        record
    }

    pub fn from_record(record: &Record<CategoryLine>) -> Option<QifCategory> {
        let name = record.line(CategoryLine::Name)?.as_text()?.to_string();
        Some(QifCategory {
            name,
            description: record
                .line(CategoryLine::Description)
                .and_then(LineValue::as_text)
                .map(str::to_string),
            income: record.line(CategoryLine::Income).is_some(),
            tax_related: record.line(CategoryLine::Tax).is_some(),
        })
    }
}

/// A category together with the subcategories registered beneath it.
#[derive(Clone, Debug, PartialEq)]
pub struct QifParentCategory {
    pub category: Rc<QifCategory>,
    pub children: Vec<Rc<QifCategory>>,
}

impl QifParentCategory {
    pub fn new(category: Rc<QifCategory>) -> Self {
        QifParentCategory {
            category,
            children: Vec::new(),
        }
    }
}

/// A class (QIF's name for a transaction tag).
#[derive(Clone, Debug, Eq, PartialEq, Hash, TypedBuilder)]
pub struct QifClass {
    #[builder(setter(into))]
    pub name: String,

    #[builder(default)]
    pub description: Option<String>,
}

impl QifClass {
    pub fn new(name: impl Into<String>) -> Self {
        QifClass {
            name: name.into(),
            description: None,
        }
    }

    pub fn to_record(&self) -> Record<ClassLine> {
        let mut record = Record::new();
        record.push(ClassLine::Name, LineValue::Text(self.name.clone()));
        if let Some(description) = &self.description {
            record.push(ClassLine::Description, LineValue::Text(description.clone()));
        }
        record
    }

    pub fn from_record(record: &Record<ClassLine>) -> Option<QifClass> {
        Some(QifClass {
            name: record.line(ClassLine::Name)?.as_text()?.to_string(),
            description: record
                .line(ClassLine::Description)
                .and_then(LineValue::as_text)
                .map(str::to_string),
        })
    }
}

#[test]
fn test_category_path() {
    let food = QifCategory::builder().name("Shopping:Food").build();
    assert_eq!(food.parent_name(), Some("Shopping"));
    assert_eq!(food.short_name(), "Food");
    let top = QifCategory::builder().name("Salary").income(true).build();
    assert_eq!(top.parent_name(), None);
    assert_eq!(QifCategory::from_record(&top.to_record()), Some(top));
}
