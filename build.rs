use vergen::EmitBuilder;

fn main() {
    // 生成构建信息（git 提交号写入启动日志）
    if let Err(e) = EmitBuilder::builder().all_build().all_git().emit() {
        println!("cargo:warning=无法生成构建信息: {}", e);
    }
}
