// Python starter script for exploring a CSV outside the browser

const TEMPLATE: &str = r#"
import pandas as pd
import matplotlib.pyplot as plt
import seaborn as sns

# Load data
df = pd.read_csv("{filename}")

# Display basic information
print("Data shape:", df.shape)
print("\nData types:")
print(df.dtypes)
print("\nSummary statistics:")
print(df.describe())

# Create visualizations
plt.figure(figsize=(12, 8))

# If numeric columns exist, create plots
numeric_cols = df.select_dtypes(include=['number']).columns

if len(numeric_cols) >= 2:
    # Correlation heatmap
    plt.figure(figsize=(10, 8))
    sns.heatmap(df[numeric_cols].corr(), annot=True, cmap='coolwarm', fmt=".2f")
    plt.title('Correlation Heatmap')
    plt.tight_layout()
    plt.show()

    # Scatter matrix
    pd.plotting.scatter_matrix(df[numeric_cols[:4]], figsize=(12, 12),
                              diagonal='kde', alpha=0.6)
    plt.tight_layout()
    plt.show()

    # Distribution of first numeric column
    plt.figure(figsize=(10, 6))
    sns.histplot(df[numeric_cols[0]], kde=True)
    plt.title(f'Distribution of {numeric_cols[0]}')
    plt.tight_layout()
    plt.show()

# Time series if a date column exists
date_cols = [col for col in df.columns if 'date' in col.lower() or 'time' in col.lower()]
if date_cols and len(numeric_cols) > 0:
    plt.figure(figsize=(12, 6))

    # Try to convert to datetime and plot time series
    try:
        df[date_cols[0]] = pd.to_datetime(df[date_cols[0]])
        df.set_index(date_cols[0])[numeric_cols[0]].plot()
        plt.title(f'{numeric_cols[0]} Over Time')
        plt.grid(True)
        plt.tight_layout()
        plt.show()
    except Exception:
        print("Could not create time series plot")
"#;

/// Escape a value for use inside a double-quoted Python string literal
fn python_string_body(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

pub fn analysis_script(filename: &str) -> String {
    TEMPLATE.replacen("{filename}", &python_string_body(filename), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_loads_named_file() {
        let script = analysis_script("sales.csv");
        assert!(script.contains("df = pd.read_csv(\"sales.csv\")"));
        assert!(script.contains("import seaborn as sns"));
        assert!(script.contains("sns.heatmap"));
        assert!(!script.contains("{filename}"));
    }

    #[test]
    fn test_filename_cannot_break_out_of_literal() {
        let script = analysis_script("evil\").system(\"rm\n.csv");
        assert!(script.contains(r#"pd.read_csv("evil\").system(\"rm\n.csv")"#));
    }

    #[test]
    fn test_python_format_fields_are_kept() {
        let script = analysis_script("a.csv");
        assert!(script.contains("f'Distribution of {numeric_cols[0]}'"));
    }
}
