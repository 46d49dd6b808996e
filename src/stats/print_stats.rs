use super::{
    config::StatsConfig,
    module_stats::{StatsDetails, TotalStats},
};

// Human readable binary magnitude, e.g. 46.170 MiB
pub fn sizeof_fmt(num: f64, suffix: &str) -> String {
    let mut num = num;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if num.abs() < 1024.0 {
            return format!("{:.3} {}{}", num, unit, suffix);
        }
        num /= 1024.0;
    }
    format!("{:.1} Yi{}", num, suffix)
}

pub fn bar(value: u64, max: u64, bar_length_max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    let length = (value as f64 / max as f64 * bar_length_max as f64) as usize;
    "#".repeat(length.min(bar_length_max))
}

pub fn print_details(details: &StatsDetails, config: &StatsConfig) {
    if config.cal_params && !details.params.is_empty() {
        print_params(details, config.bar_length_max);
    }
    if config.cal_flops && !details.flops.is_empty() {
        print_flops(details, config.bar_length_max);
    }
    if config.cal_activations && !details.activations.is_empty() {
        print_activations(details, config.bar_length_max);
    }
}

fn print_params(details: &StatsDetails, bar_length_max: usize) {
    let max = details.params.iter().map(|p| p.size).max().unwrap_or(0);

    println!("\nParameter Details:");
    println!("{:-<140}", "");
    println!("{:<32} {:<14} {:<18} {:<10} {:<10} {:<12} {:<14} {:<14} {:<8} {}",
        "Name", "Type", "Shape", "Mean", "Std", "Dims", "Size", "Size Cum", "%", "Bar");
    println!("{:-<140}", "");

    for p in &details.params {
        println!("{:<32} {:<14} {:<18} {:<10.3} {:<10.3} {:<12} {:<14} {:<14} {:<8.2} {}",
            p.name, p.class_name, p.shape.to_string(), p.mean, p.std, p.param_dim,
            sizeof_fmt(p.size as f64, "B"), sizeof_fmt(p.size_cum as f64, "B"),
            p.percentage, bar(p.size, max, bar_length_max));
    }
    println!("{:-<140}", "");
}

fn print_flops(details: &StatsDetails, bar_length_max: usize) {
    let max = details.flops.iter().map(|f| f.flops).max().unwrap_or(0);

    println!("\nFLOPs Details:");
    println!("{:-<140}", "");
    println!("{:<24} {:<14} {:<18} {:<18} {:<16} {:<16} {:<8} {}",
        "Name", "Type", "Input Shape", "Output Shape", "FLOPs", "FLOPs Cum", "%", "Bar");
    println!("{:-<140}", "");

    for f in &details.flops {
        println!("{:<24} {:<14} {:<18} {:<18} {:<16} {:<16} {:<8.2} {}",
            f.name, f.class_name, f.input_shape.to_string(), f.output_shape.to_string(),
            sizeof_fmt(f.flops as f64, "OPs"), sizeof_fmt(f.flops_cum as f64, "OPs"),
            f.percentage, bar(f.flops, max, bar_length_max));
    }
    println!("{:-<140}", "");
}

fn print_activations(details: &StatsDetails, bar_length_max: usize) {
    let max = details.activations.iter().map(|a| a.act_size).max().unwrap_or(0);

    println!("\nActivation Details:");
    println!("{:-<120}", "");
    println!("{:<24} {:<14} {:<18} {:<12} {:<14} {:<14} {:<8} {}",
        "Name", "Type", "Output Shape", "Dims", "Size", "Size Cum", "%", "Bar");
    println!("{:-<120}", "");

    for a in &details.activations {
        println!("{:<24} {:<14} {:<18} {:<12} {:<14} {:<14} {:<8.2} {}",
            a.name, a.class_name, a.output_shape.to_string(), a.act_dim,
            sizeof_fmt(a.act_size as f64, "B"), sizeof_fmt(a.act_size_cum as f64, "B"),
            a.percentage, bar(a.act_size, max, bar_length_max));
    }
    println!("{:-<120}", "");
}

pub fn print_summary(total: &TotalStats) {
    println!("\nModel Summary:");
    println!("Total Parameters: {} ({})", total.param_dims, sizeof_fmt(total.param_size as f64, "B"));
    println!("Total FLOPs: {} ({})", total.flops, sizeof_fmt(total.flops as f64, "OPs"));
    println!("Total Activations: {} ({})", total.act_dims, sizeof_fmt(total.act_size as f64, "B"));
    if total.param_dims > 0 {
        println!("FLOPs / Parameter: {:.3}", total.flops as f64 / total.param_dims as f64);
    }
}
