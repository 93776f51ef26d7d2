/// Memory category a mapping is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SharedSysv,
    SharedOther,
    Stack,
    Text,
    Data,
}

impl Category {
    /// Display order of the per-category columns.
    pub const ALL: [Category; 5] = [
        Category::SharedSysv,
        Category::SharedOther,
        Category::Stack,
        Category::Text,
        Category::Data,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::SharedSysv => "shSYSV",
            Category::SharedOther => "shOth",
            Category::Stack => "stack",
            Category::Text => "text",
            Category::Data => "data",
        }
    }
}

/// Fixed-schema accumulator of memory sizes (KiB) and CPU for a process,
/// a group, or a report total.
///
/// Every field adds when summaries are folded together, except `number`
/// (which counts contributors) and `info` (which is never merged).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub cpu_pct: f64,
    pub pswap: u64,
    pub shared_sysv: u64,
    pub shared_other: u64,
    pub stack: u64,
    pub text: u64,
    pub data: u64,
    pub ptotal: u64,
    pub pss: u64,
    /// Contributor count; a single-process summary carries `-pid`.
    pub number: i64,
    pub info: String,
}

impl Summary {
    pub fn for_pid(pid: u32) -> Self {
        Summary {
            number: -i64::from(pid),
            ..Summary::default()
        }
    }

    pub fn labeled(info: impl Into<String>) -> Self {
        Summary {
            info: info.into(),
            ..Summary::default()
        }
    }

    pub fn category(&self, cat: Category) -> u64 {
        match cat {
            Category::SharedSysv => self.shared_sysv,
            Category::SharedOther => self.shared_other,
            Category::Stack => self.stack,
            Category::Text => self.text,
            Category::Data => self.data,
        }
    }

    pub fn category_mut(&mut self, cat: Category) -> &mut u64 {
        match cat {
            Category::SharedSysv => &mut self.shared_sysv,
            Category::SharedOther => &mut self.shared_other,
            Category::Stack => &mut self.stack,
            Category::Text => &mut self.text,
            Category::Data => &mut self.data,
        }
    }

    /// Everything but data, as shown when categories are collapsed.
    pub fn other(&self) -> u64 {
        self.text + self.shared_sysv + self.shared_other + self.stack
    }

    /// Folds `self` into `total`.
    pub fn add_into(&self, total: &mut Summary) {
        total.cpu_pct += self.cpu_pct;
        total.pswap += self.pswap;
        for cat in Category::ALL {
            *total.category_mut(cat) += self.category(cat);
        }
        total.ptotal += self.ptotal;
        total.pss += self.pss;
        total.number += if self.number <= 0 { 1 } else { self.number };
    }

    /// `<pid>` for a single-process summary, `<n>x` for a count.
    pub fn count_label(&self) -> String {
        if self.number <= 0 {
            format!("{}", -self.number)
        } else {
            format!("{}x", self.number)
        }
    }
}

/// Compares two summaries against a change threshold (KiB).
///
/// The delta is the change in PSS plus the change in swapped PSS. A
/// threshold of zero or below fires on any change of at least its magnitude
/// in either direction; a positive threshold fires on growth only.
pub fn crosses_threshold(current: &Summary, previous: &Summary, threshold: i64) -> (bool, i64) {
    let delta = (current.pss as i64 - previous.pss as i64)
        + (current.pswap as i64 - previous.pswap as i64);
    let over = if threshold <= 0 {
        delta.abs() >= -threshold
    } else {
        delta >= threshold
    };
    (over, delta)
}
